pub mod agent_repository;
pub mod error;
pub mod http_repository;
pub mod in_memory_repository;

pub use agent_repository::{AgentRepository, BoxFuture};
pub use error::{ApiError, ApiResult};
pub use http_repository::HttpAgentRepository;
pub use in_memory_repository::{InMemoryAgentRepository, LiveTurn, Operation};
