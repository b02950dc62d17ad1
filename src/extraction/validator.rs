use crate::models::{PlanTier, UploadCandidate};

/// MIME types accepted for extraction.
pub const ACCEPTED_MIME_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/gif", "application/pdf"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please upload a valid image (JPEG, PNG, GIF) or PDF file.")]
    InvalidType,
    #[error("File size exceeds the {}MB limit for the {tier} plan.", .limit_bytes / 1_048_576)]
    TooLarge { limit_bytes: u64, tier: PlanTier },
}

/// Gate a candidate file before any network call is made. Pure and
/// synchronous: type first, then the tier's size limit.
pub fn validate(candidate: &UploadCandidate, tier: PlanTier) -> Result<(), ValidationError> {
    if !ACCEPTED_MIME_TYPES.contains(&candidate.content_type.as_str()) {
        return Err(ValidationError::InvalidType);
    }
    let limit_bytes = tier.max_upload_bytes();
    if candidate.size() > limit_bytes {
        return Err(ValidationError::TooLarge { limit_bytes, tier });
    }
    Ok(())
}
