pub mod classifier;
pub mod config;
pub mod consts;
pub mod engine;
pub mod events;
pub mod feedback;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod store;
