//! Principal alias kinds.

use crate::validation::rules;
use crate::{TesseraError, TesseraResult};

text_enum!(
    /// Kind of alias bound to a principal.
    AliasType {
        UserName => "USER_NAME",
        UserEmail => "USER_EMAIL",
        UserOrcid => "USER_ORCID",
        TeamName => "TEAM_NAME",
    }
);

impl AliasType {
    /// Checks an alias value against the rules of this kind.
    pub fn validate_alias(&self, alias: &str) -> TesseraResult<()> {
        let result = match self {
            Self::UserName => rules::valid_user_name(alias),
            Self::UserEmail => rules::valid_email(alias),
            Self::UserOrcid => {
                if alias.starts_with("https://orcid.org/") {
                    Ok(())
                } else {
                    Err(validator::ValidationError::new("orcid_invalid"))
                }
            }
            Self::TeamName => rules::not_blank(alias),
        };
        result.map_err(|e| {
            TesseraError::invalid_model(format!("'{alias}' is not a valid {}: {}", self, e.code))
        })
    }

    /// Whether binding a new alias of this kind replaces the principal's previous one.
    #[must_use]
    pub const fn one_per_principal(&self) -> bool {
        !matches!(self, Self::UserEmail)
    }

    /// Key under which the alias is unique, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn normalize(alias: &str) -> String {
        alias.trim().to_lowercase()
    }
}
