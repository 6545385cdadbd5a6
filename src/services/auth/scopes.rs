//! Scope matching (exact, hierarchical, wildcard).
//!
//! Scopes are `:`-separated namespaces (`users:read`, `admin:users:edit`).
//! A provided scope ending in `:*` grants its whole namespace, including the
//! bare namespace itself: `admin:*` satisfies `admin`, `admin:users` and
//! `admin:users:edit`, but not `administrator`.

const WILDCARD_SUFFIX: &str = ":*";

/// Trim and lowercase a scope.
pub fn normalize_scope(scope: &str) -> String {
    scope.trim().to_lowercase()
}

/// Split a delimited scope string (OAuth2 style `"a b c"`), dropping empty tokens.
pub fn parse_scope_string(scopes: &str, delimiter: &str) -> Vec<String> {
    scopes
        .split(delimiter)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Does the `provided` grant satisfy the `required` scope?
pub fn match_scope(required: &str, provided: &str) -> bool {
    if required == provided {
        return true;
    }

    match provided.strip_suffix(WILDCARD_SUFFIX) {
        Some(namespace) => {
            // keep the colon so `admin:*` never matches `administrator`
            let prefix = &provided[..provided.len() - 1];
            required == namespace || required.starts_with(prefix)
        }
        None => false,
    }
}

/// AND (`all_required`) / OR check of `required` against the granted scopes.
///
/// `provided == None` means the token carries no scope claim at all; that only
/// satisfies an empty requirement.
pub fn has_required_scopes<R, P>(required: &[R], provided: Option<&[P]>, all_required: bool) -> bool
where
    R: AsRef<str>,
    P: AsRef<str>,
{
    let Some(provided) = provided else {
        return required.is_empty();
    };

    let satisfied = |r: &R| provided.iter().any(|p| match_scope(r.as_ref(), p.as_ref()));

    if all_required {
        required.iter().all(satisfied)
    } else {
        required.iter().any(satisfied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_scope("  Users:READ "), "users:read");
    }

    #[test]
    fn parse_drops_empty_tokens_and_keeps_order() {
        assert_eq!(
            parse_scope_string("b  a c ", " "),
            vec!["b".to_string(), "a".to_string(), "c".to_string()]
        );
        assert_eq!(
            parse_scope_string("x,,y", ","),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(parse_scope_string("", " ").is_empty());
    }

    #[test]
    fn exact_match() {
        assert!(match_scope("users:read", "users:read"));
        assert!(!match_scope("users:read", "users:write"));
    }

    #[test]
    fn wildcard_matches_children_at_any_depth() {
        assert!(match_scope("admin:users", "admin:*"));
        assert!(match_scope("admin:users:edit", "admin:*"));
    }

    #[test]
    fn wildcard_requires_colon_boundary() {
        assert!(!match_scope("administrator", "admin:*"));
        assert!(!match_scope("users:read", "admin:*"));
    }

    // A namespace wildcard also grants the bare namespace. Kept on purpose:
    // tokens scoped `admin:*` satisfy a plain `admin` requirement.
    #[test]
    fn wildcard_grants_bare_namespace() {
        for ns in ["admin", "users", "billing:invoices"] {
            assert!(match_scope(ns, &format!("{ns}:*")));
        }
    }

    #[test]
    fn wildcard_never_crosses_namespaces() {
        let namespaces = ["admin", "users", "billing", "adm"];
        for ns1 in namespaces {
            for ns2 in namespaces {
                if ns1 != ns2 {
                    assert!(
                        !match_scope(&format!("{ns2}:x"), &format!("{ns1}:*")),
                        "{ns1}:* must not grant {ns2}:x"
                    );
                }
            }
        }
    }

    #[test]
    fn plain_scope_is_not_a_wildcard() {
        assert!(!match_scope("admin:users", "admin"));
        assert!(!match_scope("admin:users", "admin:"));
    }

    #[test]
    fn and_semantics_require_every_scope() {
        let provided = ["users:read", "posts:*"];
        assert!(has_required_scopes(
            &["users:read", "posts:write"],
            Some(&provided[..]),
            true
        ));
        assert!(!has_required_scopes(
            &["users:read", "users:write"],
            Some(&provided[..]),
            true
        ));
    }

    #[test]
    fn or_semantics_require_one_scope() {
        let provided = ["users:read"];
        assert!(has_required_scopes(
            &["users:write", "users:read"],
            Some(&provided[..]),
            false
        ));
        assert!(!has_required_scopes(
            &["users:write", "admin"],
            Some(&provided[..]),
            false
        ));
    }

    #[test]
    fn missing_scope_claim_only_satisfies_empty_requirement() {
        let empty: [&str; 0] = [];
        assert!(has_required_scopes::<&str, &str>(&empty, None, true));
        assert!(!has_required_scopes::<&str, &str>(&["users:read"], None, true));
        assert!(!has_required_scopes::<&str, &str>(&["users:read"], None, false));
    }
}
