use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::ProxyError;

pub const LIST_PLACEHOLDER: &str =
  "{listId}";
pub const SPACE_PLACEHOLDER: &str =
  "{spaceId}";

fn numeric_id_re() -> &'static Regex {
  static RE: OnceLock<Regex> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^\d+$")
      .expect("numeric id regex")
  })
}

/// ClickUp list and space ids are plain decimal strings.
pub fn is_numeric_id(raw: &str) -> bool {
  numeric_id_re().is_match(raw)
}

pub fn validate_list_id(
  raw: &str
) -> Result<(), ProxyError> {
  if is_numeric_id(raw) {
    Ok(())
  } else {
    debug!(list_id = %raw, "rejecting malformed list id");
    Err(ProxyError::InvalidListId {
      provided: raw.to_string()
    })
  }
}

pub fn validate_space_id(
  raw: &str
) -> Result<(), ProxyError> {
  if is_numeric_id(raw) {
    Ok(())
  } else {
    debug!(space_id = %raw, "rejecting malformed space id");
    Err(ProxyError::InvalidSpaceId {
      provided: raw.to_string()
    })
  }
}

pub fn require_api_key(
  raw: &str
) -> Result<&str, ProxyError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    Err(ProxyError::MissingApiKey)
  } else {
    Ok(trimmed)
  }
}

/// Checks the ids a template will actually consume. Ids that the template
/// does not reference are left alone.
#[tracing::instrument(skip_all, fields(template = %template))]
pub fn validate_for_template(
  template: &str,
  list_id: Option<&str>,
  space_id: Option<&str>
) -> Result<(), ProxyError> {
  if template.contains(LIST_PLACEHOLDER) {
    let id = list_id
      .ok_or(ProxyError::MissingListId)?;
    validate_list_id(id)?;
  }
  if template.contains(SPACE_PLACEHOLDER) {
    let id = space_id
      .ok_or(ProxyError::MissingSpaceId)?;
    validate_space_id(id)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::{
    is_numeric_id,
    require_api_key,
    validate_for_template
  };
  use crate::error::ProxyError;

  #[test]
  fn numeric_ids_only() {
    assert!(is_numeric_id("901234567"));
    assert!(!is_numeric_id("8crb1jk-29098"));
    assert!(!is_numeric_id(""));
    assert!(!is_numeric_id(" 12"));
    assert!(!is_numeric_id("12\n"));
  }

  #[test]
  fn template_drives_which_ids_are_checked() {
    let list_tpl =
      "https://api.clickup.com/api/v2/list/{listId}/task";
    assert!(
      validate_for_template(
        list_tpl,
        Some("123"),
        Some("not-numeric")
      )
      .is_ok()
    );
    assert!(matches!(
      validate_for_template(
        list_tpl,
        Some("8crb1jk-29098"),
        None
      ),
      Err(ProxyError::InvalidListId { .. })
    ));
    assert!(matches!(
      validate_for_template(
        list_tpl, None, None
      ),
      Err(ProxyError::MissingListId)
    ));

    let space_tpl =
      "https://api.clickup.com/api/v2/space/{spaceId}/list";
    assert!(matches!(
      validate_for_template(
        space_tpl,
        None,
        Some("abc")
      ),
      Err(ProxyError::InvalidSpaceId { .. })
    ));
    assert!(
      validate_for_template(
        "https://example.test/team",
        None,
        None
      )
      .is_ok()
    );
  }

  #[test]
  fn blank_api_key_is_missing() {
    assert!(matches!(
      require_api_key("  "),
      Err(ProxyError::MissingApiKey)
    ));
    assert_eq!(
      require_api_key(" pk_1 ").expect("key"),
      "pk_1"
    );
  }
}
