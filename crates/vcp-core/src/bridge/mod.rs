//! Bridge from provider-native tool calls to the textual request shape

mod normalizer;

pub use normalizer::{
    native_params, value_to_text, ProtocolBridge, DEFAULT_PROVIDER_EXECUTED_PREFIX,
    NON_OBJECT_ARGUMENT_KEY,
};
