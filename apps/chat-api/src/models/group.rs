use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Creator,
    Admin,
    Moderator,
    Member,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub user_id: String,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupSettings {
    pub only_admins_can_post: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub creator_id: String,
    pub members: Vec<GroupMember>,
    pub last_message_id: Option<String>,
    pub settings: GroupSettings,
    /// Inactive groups behave as if they did not exist.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn member_role(&self, user_id: &str) -> Option<GroupRole> {
        self.members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role)
    }

    /// Moderator-or-higher: creator, admin, or moderator.
    pub fn can_moderate(&self, user_id: &str) -> bool {
        matches!(
            self.member_role(user_id),
            Some(GroupRole::Creator | GroupRole::Admin | GroupRole::Moderator)
        )
    }

    pub fn can_post(&self, user_id: &str) -> bool {
        if !self.is_member(user_id) {
            return false;
        }
        if !self.settings.only_admins_can_post {
            return true;
        }
        self.can_moderate(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(only_admins_can_post: bool) -> Group {
        let now = Utc::now();
        Group {
            id: "grp_1".to_string(),
            name: "test".to_string(),
            avatar_url: None,
            creator_id: "usr_creator".to_string(),
            members: vec![
                GroupMember {
                    user_id: "usr_creator".to_string(),
                    role: GroupRole::Creator,
                    joined_at: now,
                },
                GroupMember {
                    user_id: "usr_mod".to_string(),
                    role: GroupRole::Moderator,
                    joined_at: now,
                },
                GroupMember {
                    user_id: "usr_member".to_string(),
                    role: GroupRole::Member,
                    joined_at: now,
                },
            ],
            last_message_id: None,
            settings: GroupSettings {
                only_admins_can_post,
            },
            is_active: true,
            created_at: now,
        }
    }

    #[test]
    fn everyone_can_post_by_default() {
        let group = group(false);
        assert!(group.can_post("usr_member"));
        assert!(!group.can_post("usr_stranger"));
    }

    #[test]
    fn admin_only_posting_requires_moderator_or_higher() {
        let group = group(true);
        assert!(group.can_post("usr_creator"));
        assert!(group.can_post("usr_mod"));
        assert!(!group.can_post("usr_member"));
    }

    #[test]
    fn member_role_lookup() {
        let group = group(false);
        assert_eq!(group.member_role("usr_mod"), Some(GroupRole::Moderator));
        assert_eq!(group.member_role("usr_stranger"), None);
    }
}
