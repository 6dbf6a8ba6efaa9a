//! Editor deep links.

use loose_gallery_core::{ProductId, Serial};

use crate::config::EditorConfig;

/// What the editor should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorRequest {
    /// Domain the template belongs to.
    pub domain_id: String,
    /// Template the design starts from.
    pub template: Serial,
    /// Existing design to reopen; `None` starts a new design.
    pub design: Option<Serial>,
    /// Product id the editor echoes back on return.
    pub product_id: Option<ProductId>,
    /// Additional parameters, appended in insertion order.
    pub extra: Vec<(String, String)>,
}

impl EditorRequest {
    /// Link for starting a new design.
    #[must_use]
    pub fn start(domain_id: impl Into<String>, template: Serial, product_id: ProductId) -> Self {
        Self {
            domain_id: domain_id.into(),
            template,
            design: None,
            product_id: Some(product_id),
            extra: Vec::new(),
        }
    }

    /// Link for reopening an existing design.
    #[must_use]
    pub fn edit(domain_id: impl Into<String>, template: Serial, design: Serial) -> Self {
        Self {
            domain_id: domain_id.into(),
            template,
            design: Some(design),
            product_id: None,
            extra: Vec::new(),
        }
    }

    /// Append an extra query parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Whether this reopens an existing design.
    #[must_use]
    pub const fn is_edit(&self) -> bool {
        self.design.is_some()
    }
}

/// Build an editor URL.
///
/// Parameters are emitted in a fixed order: domain, template, return URL,
/// API key (only when `forward_api_key` is set), product echo, existing
/// design, then extras. The same inputs always yield the same string.
#[must_use]
pub fn build_editor_url(
    config: &EditorConfig,
    api_key: Option<&str>,
    request: &EditorRequest,
) -> String {
    let names = if request.is_edit() {
        &config.edit_params
    } else {
        &config.start_params
    };

    let mut url = config.base_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(&names.domain, &request.domain_id)
            .append_pair(&names.template, request.template.as_str())
            .append_pair(&names.return_url, &config.return_url);

        if config.forward_api_key
            && let Some(key) = api_key.filter(|k| !k.is_empty())
        {
            query.append_pair(&names.api_key, key);
        }
        if let Some(product_id) = request.product_id {
            query.append_pair(&names.product, &product_id.to_string());
        }
        if let Some(design) = &request.design {
            query.append_pair(&names.design, design.as_str());
        }
        for (name, value) in &request.extra {
            query.append_pair(name, value);
        }
    }

    url.into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::config::EditorParamNames;

    fn config(forward_api_key: bool) -> EditorConfig {
        EditorConfig {
            base_url: Url::parse("https://editor.loosegallery.com").unwrap(),
            return_url: "https://shop.example.com/".to_string(),
            forward_api_key,
            start_params: EditorParamNames::default(),
            edit_params: EditorParamNames::default(),
        }
    }

    fn serial(s: &str) -> Serial {
        Serial::parse(s).unwrap()
    }

    #[test]
    fn test_start_link_parameter_order() {
        let request = EditorRequest::start("dom-1", serial("TPL0001"), ProductId::new(42));
        let url = build_editor_url(&config(true), Some("k9F2mQ7xL1"), &request);

        assert_eq!(
            url,
            "https://editor.loosegallery.com/?domain=dom-1&template=TPL0001\
             &return_url=https%3A%2F%2Fshop.example.com%2F&api_key=k9F2mQ7xL1&productId=42"
        );
    }

    #[test]
    fn test_edit_link_carries_design_serial() {
        let request = EditorRequest::edit("dom-1", serial("TPL0001"), serial("DSX123456"));
        let url = build_editor_url(&config(false), Some("k9F2mQ7xL1"), &request);

        assert!(url.ends_with("&p=DSX123456"));
        assert!(!url.contains("api_key"));
        assert!(!url.contains("productId"));
    }

    #[test]
    fn test_extras_follow_in_insertion_order() {
        let request = EditorRequest::start("dom-1", serial("TPL0001"), ProductId::new(7))
            .with_param("lang", "nl")
            .with_param("theme", "dark");
        let url = build_editor_url(&config(false), None, &request);

        assert!(url.ends_with("productId=7&lang=nl&theme=dark"));
    }

    #[test]
    fn test_custom_parameter_names() {
        let mut cfg = config(false);
        cfg.edit_params.design = "design_serial".to_string();
        let request = EditorRequest::edit("dom-1", serial("TPL0001"), serial("DSX123456"));

        let url = build_editor_url(&cfg, None, &request);
        assert!(url.ends_with("design_serial=DSX123456"));
    }

    #[test]
    fn test_deterministic() {
        let request = EditorRequest::start("dom-1", serial("TPL0001"), ProductId::new(42));
        let cfg = config(true);
        assert_eq!(
            build_editor_url(&cfg, Some("key12345"), &request),
            build_editor_url(&cfg, Some("key12345"), &request)
        );
    }
}
