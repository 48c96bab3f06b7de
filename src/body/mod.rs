pub mod frame;
pub mod joint;

pub use frame::{TrackedBody, TrackedFrame, TICKS_PER_SECOND};
pub use joint::{ConfidenceLevel, JointId, JointPose, JOINT_COUNT};
