/// Match a topic against a subscription pattern.
///
/// `"*"` matches everything, a pattern ending in `*` matches any topic that
/// starts with the part before it, anything else must be equal.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
  match pattern.strip_suffix('*') {
    Some("") => true,
    Some(prefix) => topic.starts_with(prefix),
    None => pattern == topic,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_exact_match() {
    assert!(topic_matches("deploy:started", "deploy:started"));
    assert!(!topic_matches("deploy:started", "deploy:completed"));
  }

  #[test]
  fn test_wildcard_matches_all() {
    assert!(topic_matches("*", "deploy:started"));
    assert!(topic_matches("*", ""));
  }

  #[test]
  fn test_prefix_wildcard() {
    assert!(topic_matches("deploy:*", "deploy:started"));
    assert!(topic_matches("deploy*", "deploy:started"));
    assert!(!topic_matches("job:*", "deploy:started"));
    assert!(!topic_matches("deploy:*", "deploy"));
  }
}
