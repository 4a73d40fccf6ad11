//! Script templating.
//!
//! A script is free text with `{name}` placeholders. Names resolve against
//! three scopes with custom fields first, then contact fields, then texter
//! fields. Unknown names render as the empty string so the result is always
//! sendable. Text that is not a well-formed placeholder (an unclosed brace,
//! or braces around something other than an identifier) is copied through.
//!
//! Rendering is a single left-to-right pass: substituted values are never
//! scanned again, so a rendered text without placeholders renders to itself.

use std::collections::BTreeMap;

use texter_interchange::SessionPayload;

/// Contact fields exposed to scripts, as named in templates.
pub const CONTACT_SCRIPT_FIELDS: &[&str] = &["firstName", "lastName", "cell", "zip", "external_id"];
/// Texter fields exposed to scripts, as named in templates.
pub const TEXTER_SCRIPT_FIELDS: &[&str] = &["texterFirstName", "texterLastName"];

/// Read-only values a script may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptContext {
    pub contact: BTreeMap<String, String>,
    pub texter: BTreeMap<String, String>,
    pub custom_fields: BTreeMap<String, String>,
}

impl ScriptContext {
    pub fn new(
        contact: BTreeMap<String, String>,
        texter: BTreeMap<String, String>,
        custom_fields: BTreeMap<String, String>,
    ) -> Self {
        ScriptContext {
            contact,
            texter,
            custom_fields,
        }
    }

    /// Build the three scopes from a loaded session payload.
    ///
    /// When the campaign declares custom field names only those are exposed;
    /// otherwise every custom field the contact carries is.
    pub fn from_payload(payload: &SessionPayload) -> Self {
        let c = &payload.contact;
        let contact_values = [
            Some(c.first_name.as_str()),
            Some(c.last_name.as_str()),
            Some(c.cell.as_str()),
            c.zip.as_deref(),
            c.external_id.as_deref(),
        ];
        let contact = CONTACT_SCRIPT_FIELDS
            .iter()
            .zip(contact_values)
            .filter_map(|(name, value)| Some((name.to_string(), value?.to_string())))
            .collect();

        let t = &payload.texter;
        let texter = TEXTER_SCRIPT_FIELDS
            .iter()
            .zip([t.first_name.as_str(), t.last_name.as_str()])
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let declared = &payload.campaign.custom_fields;
        let custom_fields = c
            .custom_fields
            .iter()
            .filter(|(name, _)| declared.is_empty() || declared.iter().any(|d| d == *name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        ScriptContext {
            contact,
            texter,
            custom_fields,
        }
    }

    /// Resolve one placeholder name, honouring scope precedence.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .get(name)
            .or_else(|| self.contact.get(name))
            .or_else(|| self.texter.get(name))
            .map(String::as_str)
    }
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn scan<'a>(template: &'a str, mut visit: impl FnMut(Segment<'a>)) {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find(|c: char| c == '{' || c == '}') {
            Some(close) if after.as_bytes()[close] == b'}' && is_identifier(&after[..close]) => {
                visit(Segment::Text(&rest[..open]));
                visit(Segment::Placeholder(&after[..close]));
                rest = &after[close + 1..];
            }
            _ => {
                visit(Segment::Text(&rest[..=open]));
                rest = after;
            }
        }
    }
    visit(Segment::Text(rest));
}

/// Render a template that is known to be present.
pub fn render_str(template: &str, ctx: &ScriptContext) -> String {
    let mut out = String::with_capacity(template.len());
    scan(template, |segment| match segment {
        Segment::Text(text) => out.push_str(text),
        Segment::Placeholder(name) => out.push_str(ctx.lookup(name).unwrap_or("")),
    });
    out
}

/// Render an optional template.
///
/// `None` means "no script" and yields `None`: callers leave the current
/// draft alone. `Some("")` yields `Some("")`: callers clear the draft.
pub fn render(template: Option<&str>, ctx: &ScriptContext) -> Option<String> {
    template.map(|t| render_str(t, ctx))
}

/// Placeholder names referenced by a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    scan(template, |segment| {
        if let Segment::Placeholder(name) = segment {
            names.push(name);
        }
    });
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ctx() -> ScriptContext {
        ScriptContext::new(
            map(&[("firstName", "Sam"), ("cell", "+15555550100")]),
            map(&[("texterFirstName", "Ana")]),
            map(&[("district", "7")]),
        )
    }

    #[test]
    fn substitutes_all_scopes() {
        assert_eq!(
            render_str("Hi {firstName}, it's {texterFirstName} about district {district}.", &ctx()),
            "Hi Sam, it's Ana about district 7."
        );
    }

    #[test]
    fn custom_fields_win_over_contact_and_texter() {
        let ctx = ScriptContext::new(
            map(&[("firstName", "contact")]),
            map(&[("firstName", "texter")]),
            map(&[("firstName", "custom")]),
        );
        assert_eq!(render_str("{firstName}", &ctx), "custom");

        let ctx = ScriptContext::new(
            map(&[("firstName", "contact")]),
            map(&[("firstName", "texter")]),
            BTreeMap::new(),
        );
        assert_eq!(render_str("{firstName}", &ctx), "contact");
    }

    #[test]
    fn unknown_placeholder_renders_empty() {
        assert_eq!(render_str("a{nobody}b", &ctx()), "ab");
    }

    #[test]
    fn malformed_braces_are_literal() {
        let c = ctx();
        assert_eq!(render_str("{ firstName }", &c), "{ firstName }");
        assert_eq!(render_str("open { only", &c), "open { only");
        assert_eq!(render_str("{{firstName}}", &c), "{Sam}");
        assert_eq!(render_str("{}", &c), "{}");
        assert_eq!(render_str("{1abc}", &c), "{1abc}");
        assert_eq!(render_str("trailing {", &c), "trailing {");
    }

    #[test]
    fn values_are_not_rescanned() {
        let c = ScriptContext::new(map(&[("firstName", "{cell}")]), BTreeMap::new(), BTreeMap::new());
        let once = render_str("Hi {firstName}", &c);
        assert_eq!(once, "Hi {cell}");
    }

    #[test]
    fn render_is_idempotent_without_placeholders() {
        let c = ctx();
        let once = render_str("Hi {firstName} ({district})", &c);
        assert_eq!(render_str(&once, &c), once);
    }

    #[test]
    fn none_template_is_distinct_from_empty() {
        assert_eq!(render(None, &ctx()), None);
        assert_eq!(render(Some(""), &ctx()), Some(String::new()));
    }

    #[test]
    fn non_ascii_text_survives() {
        assert_eq!(render_str("¡Hola {firstName}! ✓", &ctx()), "¡Hola Sam! ✓");
    }

    #[test]
    fn lists_placeholders() {
        assert_eq!(
            placeholders("{a} and {b_2} but not { c } or {3}"),
            vec!["a", "b_2"]
        );
    }
}
