pub mod forbidden;
pub mod response_time;
pub mod throttle;

pub use forbidden::forbidden_details;
pub use response_time::response_time;
pub use throttle::{ThrottleRule, throttle};
