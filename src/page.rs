use minijinja::{Environment, context};
use serde::Serialize;

use crate::{error::ServiceError, pipeline::SummaryArtifact, prompt::StyleTag};

const INDEX_NAME: &str = "index.html";
const INDEX_SOURCE: &str = include_str!("../templates/index.html");

#[derive(Serialize)]
struct StyleOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

/// The summarizer page. Templates named `*.html` are auto-escaped.
pub struct PageTemplate {
    environment: Environment<'static>,
}

impl PageTemplate {
    pub fn new() -> Result<Self, ServiceError> {
        let mut environment = Environment::new();
        environment.add_template(INDEX_NAME, INDEX_SOURCE)?;
        Ok(Self { environment })
    }

    /// Renders the form echoing `text` and `style`; `result` is shown only
    /// when present.
    pub fn render_index(
        &self,
        text: &str,
        style: StyleTag,
        result: Option<&SummaryArtifact>,
    ) -> Result<String, ServiceError> {
        let styles: Vec<StyleOption> = StyleTag::ALL
            .into_iter()
            .map(|option| StyleOption {
                value: option.as_str(),
                label: option.label(),
                selected: option == style,
            })
            .collect();

        let template = self.environment.get_template(INDEX_NAME)?;
        Ok(template.render(context! { text => text, styles => styles, result => result })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageTemplate {
        PageTemplate::new().unwrap()
    }

    #[test]
    fn empty_page_has_form_but_no_results() {
        let html = page().render_index("", StyleTag::News, None).unwrap();
        assert!(html.contains("<meta name=\"theme-color\" content=\"#0b0f17\">"));
        assert!(html.contains("<form method=\"post\""));
        assert!(html.contains("<option value=\"news\" selected>News</option>"));
        assert!(html.contains("<option value=\"simple-english\">Simple English</option>"));
        assert!(html.contains("placeholder=\"Paste article text here\"></textarea>"));
        assert!(!html.contains("id=\"out\""));
    }

    #[test]
    fn results_are_escaped_and_style_is_selected() {
        let artifact = SummaryArtifact {
            style: StyleTag::Marketing,
            summary: "Buy <now>".into(),
            formal: "Purchase & \"enjoy\"".into(),
            truncated: false,
        };
        let html = page()
            .render_index("<script>x</script>", StyleTag::Marketing, Some(&artifact))
            .unwrap();

        assert!(html.contains(">&lt;script&gt;x&lt;"));
        assert!(!html.contains("<script>x"));
        assert!(html.contains("<option value=\"marketing\" selected>"));
        assert!(!html.contains("<option value=\"news\" selected>"));
        assert!(html.contains("<div id=\"out\" class=\"summary\">Buy &lt;now&gt;</div>"));
        assert!(html.contains("Purchase &amp; &quot;enjoy&quot;"));
        assert!(!html.contains("cut short"));
    }

    #[test]
    fn truncation_note_follows_the_flag() {
        let artifact = SummaryArtifact {
            style: StyleTag::News,
            summary: "Short.".into(),
            formal: "Brief.".into(),
            truncated: true,
        };
        let html = page()
            .render_index("Long text", StyleTag::News, Some(&artifact))
            .unwrap();
        assert!(html.contains("cut short"));
        assert!(html.contains("<div class=\"formal-card\">Brief.</div>"));
    }
}
