//! Nodes that transform or enrich data

mod ai_compose;
mod code_edit;
mod data_transform;
mod plugin_call;
mod regex_node;
mod url_extractor;

pub use ai_compose::AiComposeNode;
pub use code_edit::{CodeEditNode, Language};
pub use data_transform::{DataTransformNode, Transform};
pub use plugin_call::PluginCallNode;
pub use regex_node::{translate_replacement, RegexFlags, RegexNode};
pub use url_extractor::{dedupe, extract_urls, type_counts, OutputFormat, TypeFilter, UrlExtractorNode, UrlKind};
