//! Node-role IAM audit (spec §4.1): for each EKS managed nodegroup, resolve
//! the attached/inline policies on its IAM role and flag anything
//! overpermissive — either `AdministratorAccess` by ARN suffix, or an inline
//! statement granting `Effect: Allow` on a wildcard `Action`.

use serde_json::Value;

use crate::errors::CollectionError;

/// An inline policy document as returned by `iam:GetRolePolicy`, already
/// URL-decoded. Scans every statement for `Effect == "Allow"` with an
/// `Action` of `"*"` or containing `"*"` as an element.
pub fn document_is_overpermissive(document_json: &str) -> bool {
    let Ok(doc) = serde_json::from_str::<Value>(document_json) else {
        return false;
    };
    let statements = match doc.get("Statement") {
        Some(Value::Array(list)) => list.clone(),
        Some(single) => vec![single.clone()],
        None => return false,
    };

    statements.iter().any(|stmt| {
        let effect_allow = stmt.get("Effect").and_then(Value::as_str) == Some("Allow");
        if !effect_allow {
            return false;
        }
        action_is_wildcard(stmt.get("Action"))
    })
}

fn action_is_wildcard(action: Option<&Value>) -> bool {
    match action {
        Some(Value::String(s)) => s == "*" || s.contains('*'),
        Some(Value::Array(items)) => items.iter().any(|v| matches!(v, Value::String(s) if s == "*" || s.contains('*'))),
        _ => false,
    }
}

/// Decodes a URL-encoded IAM policy document (as returned inline by
/// `get_role_policy`) and checks it for overpermissive grants.
pub fn decode_and_check(url_encoded_document: &str) -> Result<bool, CollectionError> {
    let decoded = urlencoding::decode(url_encoded_document)
        .map_err(|e| CollectionError::Sdk(format!("failed to url-decode policy document: {e}")))?;
    Ok(document_is_overpermissive(&decoded))
}

/// `true` iff a managed-policy ARN is the AWS-managed `AdministratorAccess`
/// policy.
pub fn is_admin_policy_arn(policy_arn: &str) -> bool {
    policy_arn.ends_with("/AdministratorAccess")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_wildcard_action_is_overpermissive() {
        let doc = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#;
        assert!(document_is_overpermissive(doc));
    }

    #[test]
    fn scoped_action_is_not_overpermissive() {
        let doc = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"*"}]}"#;
        assert!(!document_is_overpermissive(doc));
    }

    #[test]
    fn deny_statement_with_wildcard_is_not_overpermissive() {
        let doc = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Action":"*","Resource":"*"}]}"#;
        assert!(!document_is_overpermissive(doc));
    }

    #[test]
    fn wildcard_inside_action_array_is_overpermissive() {
        let doc = r#"{"Statement":[{"Effect":"Allow","Action":["s3:GetObject","ec2:*"],"Resource":"*"}]}"#;
        assert!(document_is_overpermissive(doc));
    }

    #[test]
    fn admin_policy_arn_suffix_detection() {
        assert!(is_admin_policy_arn("arn:aws:iam::aws:policy/AdministratorAccess"));
        assert!(!is_admin_policy_arn("arn:aws:iam::aws:policy/ReadOnlyAccess"));
    }
}
