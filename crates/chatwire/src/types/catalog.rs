//! Read-only model catalog records
//!
//! Catalog data is produced elsewhere (static files, vendor `/models` lists)
//! and only consumed here.

use serde::{Deserialize, Serialize};

use crate::protocol::openai::OpenAiModelList;

/// Capability tag a model advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelInterface {
    /// Chat completions
    #[serde(rename = "oai-chat")]
    Chat,
    /// Function/tool calling
    #[serde(rename = "oai-chat-fn")]
    ChatFunctions,
    /// JSON output mode
    #[serde(rename = "oai-chat-json")]
    ChatJson,
    /// Image inputs
    #[serde(rename = "oai-chat-vision")]
    ChatVision,
    /// Reasoning models
    #[serde(rename = "oai-chat-reasoning")]
    ChatReasoning,
    /// Legacy text completions
    #[serde(rename = "oai-complete")]
    Complete,
    /// Tag this crate does not recognise
    #[serde(other)]
    Unknown,
}

/// Per-token pricing, in dollars per million tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_out: Option<f64>,
}

/// Public benchmark scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    /// Chatbot Arena ELO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cba_elo: Option<f64>,
    /// Chatbot Arena MMLU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cba_mmlu: Option<f64>,
}

/// Description of a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescription {
    /// Vendor model identifier
    pub id: String,
    /// Display label
    pub label: String,
    /// Unix timestamp the vendor reports for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Context window in tokens; `None` when the vendor does not say
    #[serde(default)]
    pub context_window: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Capability tags
    pub interfaces: Vec<ModelInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Benchmark>,
    /// Hide from default listings
    #[serde(default)]
    pub hidden: bool,
}

impl ModelDescription {
    /// Whether the model advertises `interface`
    pub fn supports(&self, interface: ModelInterface) -> bool {
        self.interfaces.contains(&interface)
    }
}

/// Ordered, read-only collection of model descriptions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: Vec<ModelDescription>,
}

impl ModelCatalog {
    pub const fn new(models: Vec<ModelDescription>) -> Self {
        Self { models }
    }

    /// Parse a JSON array of model descriptions
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is not a valid list
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Build bare chat descriptions from a vendor `/models` listing
    pub fn from_model_list(list: OpenAiModelList) -> Self {
        let models = list
            .data
            .into_iter()
            .map(|model| ModelDescription {
                label: model.id.clone(),
                id: model.id,
                created: model.created.filter(|created| *created > 0),
                description: None,
                context_window: None,
                max_completion_tokens: None,
                interfaces: vec![ModelInterface::Chat],
                pricing: None,
                benchmark: None,
                hidden: false,
            })
            .collect();

        Self { models }
    }

    /// Look up a model by id
    pub fn get(&self, id: &str) -> Option<&ModelDescription> {
        self.models.iter().find(|model| model.id == id)
    }

    /// Models advertising `interface`, in catalog order
    pub fn supporting(&self, interface: ModelInterface) -> impl Iterator<Item = &ModelDescription> {
        self.models.iter().filter(move |model| model.supports(interface))
    }

    /// Models not marked hidden, in catalog order
    pub fn visible(&self) -> impl Iterator<Item = &ModelDescription> {
        self.models.iter().filter(|model| !model.hidden)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "id": "gpt-4o",
            "label": "GPT-4o",
            "contextWindow": 128000,
            "maxCompletionTokens": 16384,
            "interfaces": ["oai-chat", "oai-chat-fn", "oai-chat-json", "oai-chat-vision"],
            "pricing": {"chatIn": 2.5, "chatOut": 10},
            "benchmark": {"cbaElo": 1287}
        },
        {
            "id": "gpt-3.5-turbo-instruct",
            "label": "GPT-3.5 Instruct",
            "contextWindow": null,
            "interfaces": ["oai-complete"],
            "hidden": true
        }
    ]"#;

    #[test]
    fn parse_catalog() {
        let catalog = ModelCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let gpt4o = catalog.get("gpt-4o").unwrap();
        assert_eq!(gpt4o.context_window, Some(128_000));
        assert!(gpt4o.supports(ModelInterface::ChatFunctions));
        assert_eq!(gpt4o.pricing.and_then(|p| p.chat_out), Some(10.0));

        let instruct = catalog.get("gpt-3.5-turbo-instruct").unwrap();
        assert_eq!(instruct.context_window, None);
    }

    #[test]
    fn filters() {
        let catalog = ModelCatalog::from_json(CATALOG).unwrap();
        let vision: Vec<_> = catalog.supporting(ModelInterface::ChatVision).map(|m| m.id.as_str()).collect();
        assert_eq!(vision, vec!["gpt-4o"]);
        assert_eq!(catalog.visible().count(), 1);
    }

    #[test]
    fn unknown_interface_tolerated() {
        let json = r#"[{"id": "x", "label": "x", "interfaces": ["oai-chat", "telepathy"]}]"#;
        let catalog = ModelCatalog::from_json(json).unwrap();
        let model = catalog.get("x").unwrap();
        assert_eq!(model.interfaces, vec![ModelInterface::Chat, ModelInterface::Unknown]);
        assert!(model.supports(ModelInterface::Chat));
    }

    #[test]
    fn from_vendor_listing() {
        let list: OpenAiModelList = serde_json::from_value(serde_json::json!({
            "object": "list",
            "data": [
                {"id": "mistral-large-latest", "object": "model", "created": 1_717_000_000, "owned_by": "mistralai"},
                {"id": "local-model", "object": "model"}
            ]
        }))
        .unwrap();

        let catalog = ModelCatalog::from_model_list(list);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("mistral-large-latest").unwrap().created, Some(1_717_000_000));
        assert_eq!(catalog.get("local-model").unwrap().created, None);
        assert!(catalog.get("local-model").unwrap().supports(ModelInterface::Chat));
    }
}
