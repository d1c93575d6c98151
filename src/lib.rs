//! Story synthesis for clusters of news articles.
//!
//! All semantic work (summarizing, classifying, matching) is delegated to an
//! external text-generation collaborator. This crate composes the
//! instruction for each call, decodes the untrusted response into typed
//! records with per-field defaults, and drives the bounded recursion that
//! turns sub-groups into sub-stories.
pub mod capability;
pub mod classify;
pub mod collaborator;
pub mod compose;
pub mod config;
pub mod decode;
pub mod input;
pub mod link;
pub mod model;
pub mod output;
pub mod story;

pub use capability::{Capability, CapabilityDescriptor, PipelineConfig, REGISTRY};
pub use classify::{Topic, TopicPolicy};
pub use collaborator::{Collaborator, CollaboratorRequest, MalformedResponse};
pub use model::{
    Article, Classification, ClassifiedStory, Location, Quote, StoryLink, StoryNode, SubGroup,
};
pub use story::{CallMode, Pipeline};
