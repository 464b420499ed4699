// Resume analysis: prompt construction, the upstream model call, and defensive
// parsing of the model's JSON into one canonical result.
// All model calls go through llm_client. Nothing here speaks HTTP to Gemini.

pub mod client;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod store;
