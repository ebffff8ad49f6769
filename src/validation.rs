use serde::Deserialize;
use thiserror::Error;

use crate::proposal::VoterType;
use crate::units::parse_token_amount;

pub const TITLE_MAX_LENGTH: usize = 100;
pub const DESCRIPTION_MAX_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title exceeds {max} characters", max = TITLE_MAX_LENGTH)]
    TitleTooLong,
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("description exceeds {max} characters", max = DESCRIPTION_MAX_LENGTH)]
    DescriptionTooLong,
    #[error("reward amount must be a positive number")]
    NonPositiveReward,
    #[error("invalid reward amount: {0}")]
    InvalidReward(String),
}

/// Proposal fields as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProposalDraft {
    pub title: String,
    pub description: String,
    pub reward_amount: String,
    pub voter_type: VoterType,
}

/// A draft that passed every client-side check, reward converted to base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProposal {
    pub title: String,
    pub description: String,
    pub reward_amount: u128,
    pub voter_type: VoterType,
}

impl ProposalDraft {
    pub fn validate(&self) -> Result<ValidatedProposal, ValidationError> {
        let title = canonicalize_title(&self.title)?;
        let description = canonicalize_description(&self.description)?;
        let reward_amount = parse_reward_amount(&self.reward_amount)?;
        Ok(ValidatedProposal {
            title,
            description,
            reward_amount,
            voter_type: self.voter_type,
        })
    }
}

pub fn canonicalize_title(value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if value.chars().count() > TITLE_MAX_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(value.to_string())
}

pub fn canonicalize_description(value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    if value.chars().count() > DESCRIPTION_MAX_LENGTH {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(value.to_string())
}

pub fn parse_reward_amount(value: &str) -> Result<u128, ValidationError> {
    if value.trim().starts_with('-') {
        return Err(ValidationError::NonPositiveReward);
    }
    let amount =
        parse_token_amount(value).map_err(|err| ValidationError::InvalidReward(err.to_string()))?;
    if amount == 0 {
        return Err(ValidationError::NonPositiveReward);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::WEI_PER_TOKEN;

    fn draft(title: &str, description: &str, reward: &str) -> ProposalDraft {
        ProposalDraft {
            title: title.to_string(),
            description: description.to_string(),
            reward_amount: reward.to_string(),
            voter_type: VoterType::Farm,
        }
    }

    #[test]
    fn title_length_boundary() {
        let at_limit = "t".repeat(TITLE_MAX_LENGTH);
        assert_eq!(canonicalize_title(&at_limit).unwrap(), at_limit);
        let over_limit = "t".repeat(TITLE_MAX_LENGTH + 1);
        assert_eq!(
            canonicalize_title(&over_limit),
            Err(ValidationError::TitleTooLong)
        );
        assert_eq!(canonicalize_title("   "), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        let accented = "é".repeat(TITLE_MAX_LENGTH);
        assert!(canonicalize_title(&accented).is_ok());
    }

    #[test]
    fn description_length_boundary() {
        let at_limit = "d".repeat(DESCRIPTION_MAX_LENGTH);
        assert!(canonicalize_description(&at_limit).is_ok());
        let over_limit = "d".repeat(DESCRIPTION_MAX_LENGTH + 1);
        assert_eq!(
            canonicalize_description(&over_limit),
            Err(ValidationError::DescriptionTooLong)
        );
        assert_eq!(
            canonicalize_description(""),
            Err(ValidationError::EmptyDescription)
        );
    }

    #[test]
    fn reward_must_be_positive() {
        assert_eq!(
            parse_reward_amount("0"),
            Err(ValidationError::NonPositiveReward)
        );
        assert_eq!(
            parse_reward_amount("-5"),
            Err(ValidationError::NonPositiveReward)
        );
        assert_eq!(
            parse_reward_amount("0.0"),
            Err(ValidationError::NonPositiveReward)
        );
        assert!(matches!(
            parse_reward_amount("abc"),
            Err(ValidationError::InvalidReward(_))
        ));
        assert_eq!(parse_reward_amount("50").unwrap(), 50 * WEI_PER_TOKEN);
    }

    #[test]
    fn draft_validation_converts_reward() {
        let validated = draft("Title", "Body", "2.5").validate().unwrap();
        assert_eq!(validated.reward_amount, 2 * WEI_PER_TOKEN + WEI_PER_TOKEN / 2);
        assert_eq!(validated.voter_type, VoterType::Farm);

        assert_eq!(
            draft("", "Body", "1").validate(),
            Err(ValidationError::EmptyTitle)
        );
        assert_eq!(
            draft("Title", "Body", "").validate(),
            Err(ValidationError::InvalidReward("amount cannot be empty".to_string()))
        );
    }
}
