//! Structural validation of the negotiation records.
//!
//! # Responsibility
//! - Verify the shape and version of the layer-info record before anything
//!   else runs.
//!
//! # Invariants
//! - Validation is side-effect-free: no logging sinks, no store writes, no
//!   chain contact.

use crate::chain::{
    ApiLayerCreateInfo, NegotiationStructType, API_LAYER_CREATE_INFO_STRUCT_SIZE,
    API_LAYER_CREATE_INFO_STRUCT_VERSION, API_LAYER_NEXT_INFO_STRUCT_SIZE,
    API_LAYER_NEXT_INFO_STRUCT_VERSION,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    CreateInfoTypeMismatch(NegotiationStructType),
    CreateInfoVersionMismatch { expected: u32, actual: u32 },
    CreateInfoSizeMismatch { expected: u32, actual: u32 },
    MissingNextInfo,
    NextInfoTypeMismatch(NegotiationStructType),
    NextInfoVersionMismatch { expected: u32, actual: u32 },
    NextInfoSizeMismatch { expected: u32, actual: u32 },
    LayerNameMismatch { expected: &'static str, actual: String },
    MissingNextResolver,
    MissingNextCreate,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateInfoTypeMismatch(actual) => {
                write!(f, "create-info struct type mismatch: {actual}")
            }
            Self::CreateInfoVersionMismatch { expected, actual } => write!(
                f,
                "create-info struct version mismatch: expected {expected}, got {actual}"
            ),
            Self::CreateInfoSizeMismatch { expected, actual } => write!(
                f,
                "create-info struct size mismatch: expected {expected}, got {actual}"
            ),
            Self::MissingNextInfo => write!(f, "next-info record is missing"),
            Self::NextInfoTypeMismatch(actual) => {
                write!(f, "next-info struct type mismatch: {actual}")
            }
            Self::NextInfoVersionMismatch { expected, actual } => write!(
                f,
                "next-info struct version mismatch: expected {expected}, got {actual}"
            ),
            Self::NextInfoSizeMismatch { expected, actual } => write!(
                f,
                "next-info struct size mismatch: expected {expected}, got {actual}"
            ),
            Self::LayerNameMismatch { expected, actual } => write!(
                f,
                "next-info layer name mismatch: expected {expected}, got {actual}"
            ),
            Self::MissingNextResolver => write!(f, "next-level proc resolver is null"),
            Self::MissingNextCreate => write!(f, "next-level create function is null"),
        }
    }
}

impl Error for ValidationError {}

/// Validates the enclosing layer-info record and its first chain record.
pub fn validate_layer_info(info: &ApiLayerCreateInfo) -> Result<(), ValidationError> {
    if info.struct_type != NegotiationStructType::ApiLayerCreateInfo {
        return Err(ValidationError::CreateInfoTypeMismatch(info.struct_type));
    }
    if info.struct_version != API_LAYER_CREATE_INFO_STRUCT_VERSION {
        return Err(ValidationError::CreateInfoVersionMismatch {
            expected: API_LAYER_CREATE_INFO_STRUCT_VERSION,
            actual: info.struct_version,
        });
    }
    if info.struct_size != API_LAYER_CREATE_INFO_STRUCT_SIZE {
        return Err(ValidationError::CreateInfoSizeMismatch {
            expected: API_LAYER_CREATE_INFO_STRUCT_SIZE,
            actual: info.struct_size,
        });
    }

    let next = info.next_info.first().ok_or(ValidationError::MissingNextInfo)?;
    if next.struct_type != NegotiationStructType::ApiLayerNextInfo {
        return Err(ValidationError::NextInfoTypeMismatch(next.struct_type));
    }
    if next.struct_version != API_LAYER_NEXT_INFO_STRUCT_VERSION {
        return Err(ValidationError::NextInfoVersionMismatch {
            expected: API_LAYER_NEXT_INFO_STRUCT_VERSION,
            actual: next.struct_version,
        });
    }
    if next.struct_size != API_LAYER_NEXT_INFO_STRUCT_SIZE {
        return Err(ValidationError::NextInfoSizeMismatch {
            expected: API_LAYER_NEXT_INFO_STRUCT_SIZE,
            actual: next.struct_size,
        });
    }
    if next.layer_name != crate::LAYER_NAME {
        return Err(ValidationError::LayerNameMismatch {
            expected: crate::LAYER_NAME,
            actual: next.layer_name.clone(),
        });
    }
    if next.next_get_proc.is_none() {
        return Err(ValidationError::MissingNextResolver);
    }
    if next.next_create.is_none() {
        return Err(ValidationError::MissingNextCreate);
    }

    Ok(())
}
