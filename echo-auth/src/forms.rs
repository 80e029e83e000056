//! Narrow HTML form queries over the sign-in pages
//!
//! The sign-in flow is driven by server-rendered forms. Only three questions
//! are ever asked of a page: where does the login form submit, which hidden
//! fields does it carry, and is a given element present. Each call parses the
//! markup and returns owned data, so no parsed document outlives the call.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// Name of the preferred login form
const SIGNIN_FORM: &str = "signIn";

/// Where and how a form submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub method: String,
    pub action: String,
}

/// Target of the login form: the `signIn` form if present, else the first form.
///
/// Returns `None` when there is no form or it lacks `method` or `action`.
pub fn find_form(html: &str) -> Option<FormTarget> {
    let document = Html::parse_document(html);
    let form = login_form(&document)?;
    let method = form.value().attr("method")?;
    let action = form.value().attr("action")?;
    Some(FormTarget {
        method: method.to_string(),
        action: action.to_string(),
    })
}

/// Hidden `<input>` fields of the login form, or `None` without a form
pub fn hidden_inputs(html: &str) -> Option<BTreeMap<String, String>> {
    let document = Html::parse_document(html);
    let form = login_form(&document)?;
    let inputs = Selector::parse("input").ok()?;

    let fields = form
        .select(&inputs)
        .filter(|input| {
            input
                .value()
                .attr("type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"))
        })
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();
    Some(fields)
}

/// Whether any element carries the given id
pub fn has_element_id(html: &str, id: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(with_id) = Selector::parse("[id]") else {
        return false;
    };
    let found = document
        .select(&with_id)
        .any(|element| element.value().id() == Some(id));
    found
}

fn login_form(document: &Html) -> Option<ElementRef<'_>> {
    let named = Selector::parse(&format!(r#"form[name="{}"]"#, SIGNIN_FORM)).ok()?;
    let any = Selector::parse("form").ok()?;
    document
        .select(&named)
        .next()
        .or_else(|| document.select(&any).next())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNIN_PAGE: &str = r#"
        <html><body>
            <form name="search" method="get" action="/search">
                <input type="hidden" name="ignored" value="1">
            </form>
            <form name="signIn" method="post" action="https://www.amazon.com/ap/signin">
                <input type="hidden" name="appActionToken" value="tok">
                <input type="HIDDEN" name="workflowState" value="ws">
                <input type="hidden" name="empty">
                <input type="email" name="email" value="">
                <input type="password" name="password">
            </form>
        </body></html>
    "#;

    const MFA_PAGE: &str = r#"
        <html><body>
            <form id="auth-mfa-form" method="post" action="/ap/signin">
                <input type="hidden" name="otpCtx" value="ctx">
                <input id="auth-mfa-otpcode" type="tel" name="otpCode">
            </form>
        </body></html>
    "#;

    #[test]
    fn test_named_form_is_preferred() {
        let target = find_form(SIGNIN_PAGE).unwrap();
        assert_eq!(target.method, "post");
        assert_eq!(target.action, "https://www.amazon.com/ap/signin");
    }

    #[test]
    fn test_hidden_inputs_of_login_form() {
        let fields = hidden_inputs(SIGNIN_PAGE).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["appActionToken"], "tok");
        assert_eq!(fields["workflowState"], "ws");
        assert_eq!(fields["empty"], "");
        assert!(!fields.contains_key("ignored"));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn test_first_form_fallback() {
        let target = find_form(MFA_PAGE).unwrap();
        assert_eq!(target.action, "/ap/signin");
        assert_eq!(hidden_inputs(MFA_PAGE).unwrap()["otpCtx"], "ctx");
    }

    #[test]
    fn test_missing_form() {
        let page = "<html><body><p>Nothing here</p></body></html>";
        assert!(find_form(page).is_none());
        assert!(hidden_inputs(page).is_none());
        assert!(find_form(r#"<form action="/x"></form>"#).is_none());
    }

    #[test]
    fn test_element_id_lookup() {
        assert!(has_element_id(MFA_PAGE, "auth-mfa-otpcode"));
        assert!(!has_element_id(SIGNIN_PAGE, "auth-mfa-otpcode"));
    }
}
