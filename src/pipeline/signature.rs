//! Signature block template.

use super::html::{escape_html, image_src, insert_before_body_close};
use super::SignatureInjector;
use crate::error::StageError;
use crate::input::{is_url, Signature};

/// Appends a `<div class="signature">` at the end of the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSignatureInjector;

impl SignatureInjector for TemplateSignatureInjector {
    fn inject_signature(
        &self,
        html: &str,
        signature: Option<&Signature>,
    ) -> Result<String, StageError> {
        match signature {
            Some(sig) => Ok(insert_before_body_close(html, &render_signature(sig)?)),
            None => Ok(html.to_string()),
        }
    }
}

fn render_signature(sig: &Signature) -> Result<String, StageError> {
    let mut out = String::from("\n<div class=\"signature\">\n");

    if !sig.image_path.is_empty() {
        out.push_str(&format!(
            "<img class=\"signature-image\" src=\"{}\" alt=\"\">\n",
            escape_html(&image_src(&sig.image_path)?)
        ));
    }

    for (class, value) in [
        ("signature-name", &sig.name),
        ("signature-title", &sig.title),
        ("signature-department", &sig.department),
        ("signature-organization", &sig.organization),
        ("signature-address", &sig.address),
        ("signature-phone", &sig.phone),
    ] {
        if !value.is_empty() {
            out.push_str(&format!(
                "<div class=\"{class}\">{}</div>\n",
                escape_html(value)
            ));
        }
    }

    if !sig.email.is_empty() {
        let email = escape_html(&sig.email);
        out.push_str(&format!(
            "<div class=\"signature-email\"><a href=\"mailto:{email}\">{email}</a></div>\n"
        ));
    }

    let links: Vec<_> = sig.links.iter().filter(|l| !l.url.is_empty()).collect();
    if !links.is_empty() {
        out.push_str("<ul class=\"signature-links\">\n");
        for link in links {
            let label = if link.label.is_empty() {
                &link.url
            } else {
                &link.label
            };
            // Only web links are clickable; anything else is shown as text.
            if is_url(&link.url) {
                out.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    escape_html(&link.url),
                    escape_html(label)
                ));
            } else {
                out.push_str(&format!("<li>{}</li>\n", escape_html(label)));
            }
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</div>\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Link;

    const DOC: &str = "<html><body>\n<p>Body</p>\n</body></html>";

    #[test]
    fn signature_goes_after_content() {
        let sig = Signature {
            name: "Ada Lovelace".into(),
            title: "Analyst".into(),
            email: "ada@example.com".into(),
            ..Default::default()
        };
        let out = TemplateSignatureInjector
            .inject_signature(DOC, Some(&sig))
            .unwrap();
        assert!(out.find("<p>Body</p>").unwrap() < out.find("class=\"signature\"").unwrap());
        assert!(out.contains("<div class=\"signature-name\">Ada Lovelace</div>"));
        assert!(out.contains("href=\"mailto:ada@example.com\""));
        assert!(out.trim_end().ends_with("</body></html>"));
    }

    #[test]
    fn links_render_with_labels() {
        let sig = Signature {
            name: "A".into(),
            links: vec![
                Link {
                    label: "Site".into(),
                    url: "https://example.com".into(),
                },
                Link {
                    label: String::new(),
                    url: "https://b.example.com".into(),
                },
                Link {
                    label: "Script".into(),
                    url: "javascript:alert(1)".into(),
                },
            ],
            ..Default::default()
        };
        let out = TemplateSignatureInjector
            .inject_signature(DOC, Some(&sig))
            .unwrap();
        assert!(out.contains("<a href=\"https://example.com\">Site</a>"));
        assert!(out.contains(">https://b.example.com</a>"));
        assert!(out.contains("<li>Script</li>"));
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn none_is_a_no_op() {
        assert_eq!(
            TemplateSignatureInjector.inject_signature(DOC, None).unwrap(),
            DOC
        );
    }
}
