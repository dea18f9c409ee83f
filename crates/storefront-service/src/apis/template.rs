//! Template catalog endpoint.

use serde::Serialize;
use storefront_engine::StorefrontEngine;
use storefront_types::Template;

/// Response for `GET /api/templates`.
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
	pub templates: Vec<Template>,
}

/// Lists the configured template catalog. The catalog is public; no actor
/// is required to browse it.
pub fn list_templates(engine: &StorefrontEngine) -> TemplateListResponse {
	TemplateListResponse {
		templates: engine.config().catalog.templates.clone(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apis::fixtures;

	#[test]
	fn lists_the_configured_catalog() {
		let engine = fixtures::engine();

		let response = list_templates(&engine);

		assert_eq!(response.templates.len(), 1);
		assert_eq!(response.templates[0].id, "zay");
		assert_eq!(response.templates[0].category, "E-commerce");
	}
}
