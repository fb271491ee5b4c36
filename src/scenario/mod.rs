pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::ScenarioLoader;
pub use types::{
    AssertionSpec, DurationValue, JsonPathAssertion, Member, Method, RequestBlock, RequestSpec,
    Scenario, ScenarioSource, Subject, XPathAssertion,
};
