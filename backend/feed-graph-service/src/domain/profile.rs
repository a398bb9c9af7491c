use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::comment::CommentAuthor;
use super::post::PostAuthor;

/// Display snapshot of a user as returned by the profile store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar: Option<String>,
    pub headline: Option<String>,
}

impl Profile {
    /// Individual account: "{name} {family}" plus an optional headline
    pub fn personal(
        user_id: Uuid,
        name: &str,
        family: &str,
        headline: Option<String>,
        avatar: Option<String>,
    ) -> Self {
        Self {
            user_id,
            display_name: format!("{} {}", name, family),
            avatar,
            headline,
        }
    }

    /// Organisation account: company name, never a headline
    pub fn organization(user_id: Uuid, company_name: &str, avatar: Option<String>) -> Self {
        Self {
            user_id,
            display_name: company_name.to_string(),
            avatar,
            headline: None,
        }
    }

    pub fn post_author(&self) -> PostAuthor {
        PostAuthor {
            user_id: self.user_id,
            user_display_name: self.display_name.clone(),
            user_headline: self.headline.clone(),
            user_avatar: self.avatar.clone(),
        }
    }

    pub fn comment_author(&self) -> CommentAuthor {
        CommentAuthor {
            user_id: self.user_id,
            user_display_name: self.display_name.clone(),
            user_avatar: self.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_display_name() {
        let profile = Profile::personal(
            Uuid::new_v4(),
            "Ada",
            "Lovelace",
            Some("Engineer".into()),
            None,
        );
        assert_eq!(profile.display_name, "Ada Lovelace");
        assert_eq!(profile.post_author().user_headline.as_deref(), Some("Engineer"));
        assert!(profile.comment_author().user_avatar.is_none());
    }

    #[test]
    fn test_organization_has_no_headline() {
        let profile = Profile::organization(Uuid::new_v4(), "Acme", Some("acme.png".into()));
        assert_eq!(profile.display_name, "Acme");
        assert!(profile.headline.is_none());
        assert_eq!(profile.avatar.as_deref(), Some("acme.png"));
    }
}
