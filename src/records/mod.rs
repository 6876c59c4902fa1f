pub mod ace;
pub mod container;
pub mod node;

pub use ace::{
    ACES_TABLE, Ace, AceKey, AceType, PERMISSION_EXECUTE, PERMISSION_READ, PERMISSION_WRITE,
};
pub use container::{
    CONTAINER_STATUS_TABLE, CONTAINER_TO_CLEAN_TABLE, ContainerStatus, ContainerToClean,
    ContainerUpdateKey, FINISHED_APPLICATION_TABLE, FinishedApplication, NodeMemberKey,
    UPDATED_CONTAINER_INFO_TABLE, UpdatedContainerInfo,
};
pub use node::{
    NEXT_HEARTBEAT_TABLE, NextHeartbeat, NodeCore, NodeState, PENDING_EVENT_TABLE, PendingEvent,
    PendingEventKey, PendingEventStatus, PendingEventType, RESOURCE_TABLE, RMNODE_TABLE,
    ResourceCapacity,
};
