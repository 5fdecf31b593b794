mod ecs_client;

pub use ecs_client::EcsTaskApi;
