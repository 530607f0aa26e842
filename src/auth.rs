use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::platform::Sender;

/// Senders allowed to feed the relay. Built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    user_ids: HashSet<u64>,
    usernames: HashSet<String>,
}

impl AllowList {
    pub fn new(
        user_ids: impl IntoIterator<Item = u64>,
        usernames: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            user_ids: user_ids.into_iter().collect(),
            usernames: usernames
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Either credential suffices: a matching ID or a matching username.
    pub fn is_authorized(&self, sender: Option<&Sender>) -> bool {
        let Some(sender) = sender else {
            return false;
        };

        if self.user_ids.contains(&sender.id) {
            return true;
        }
        sender
            .username
            .as_deref()
            .is_some_and(|name| self.usernames.contains(name))
    }

    pub fn len(&self) -> usize {
        self.user_ids.len() + self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn parse_user_ids(list: &str) -> Result<Vec<u64>> {
    split_list(list)
        .map(|id| {
            id.parse::<u64>()
                .with_context(|| format!("invalid allowed user id: {}", id))
        })
        .collect()
}

/// Comma-separated usernames, blank entries ignored.
pub fn parse_usernames(list: &str) -> Vec<String> {
    split_list(list).map(str::to_string).collect()
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(ids: &str, names: &str) -> AllowList {
        AllowList::new(parse_user_ids(ids).unwrap(), parse_usernames(names))
    }

    fn sender(id: u64, username: Option<&str>) -> Sender {
        Sender {
            id,
            username: username.map(str::to_string),
            first_name: "Test".to_string(),
            last_name: None,
        }
    }

    #[test]
    fn test_absent_sender_is_rejected() {
        let allow = allow("1,2", "alice");
        assert!(!allow.is_authorized(None));
    }

    #[test]
    fn test_id_or_username_is_enough() {
        let allow = allow("100, 200", "alice");
        assert!(allow.is_authorized(Some(&sender(100, None))));
        assert!(allow.is_authorized(Some(&sender(999, Some("alice")))));
        assert!(allow.is_authorized(Some(&sender(200, Some("mallory")))));
    }

    #[test]
    fn test_unknown_sender_is_rejected() {
        let allow = allow("100", "alice");
        assert!(!allow.is_authorized(Some(&sender(101, Some("bob")))));
        assert!(!allow.is_authorized(Some(&sender(101, None))));
    }

    #[test]
    fn test_empty_lists_reject_everyone() {
        let allow = allow("", " , ");
        assert!(allow.is_empty());
        assert!(!allow.is_authorized(Some(&sender(1, Some("")))));
    }

    #[test]
    fn test_malformed_id_is_an_error() {
        let err = parse_user_ids("12,abc").unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_parse_usernames_trims_and_skips_blanks() {
        assert_eq!(parse_usernames(" ada, ,grace ,"), vec!["ada", "grace"]);
        assert!(parse_usernames("").is_empty());
    }
}
