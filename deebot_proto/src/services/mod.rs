//! Typed operations over the firmware's ecovacs services.
//!
//! Every module follows the same shape: build request bytes with the
//! payload writer, issue the call through a [`deebot_ros::ServiceClient`],
//! parse the response into domain types. Codec functions are free
//! functions so they can be exercised without a socket.

pub mod alert;
pub mod lifespan;
pub mod map;
pub mod position;
pub mod setting;
pub mod spot_area;
pub mod statistics;
pub mod trace_log;
pub mod virtual_wall;
pub mod work;
