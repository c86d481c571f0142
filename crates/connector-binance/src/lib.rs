mod supervisor;
mod user_data_parser;
mod user_data_stream;

pub use supervisor::SessionSupervisor;
pub use user_data_parser::{parse_stream_frame, parse_user_data_message};
pub use user_data_stream::{run_user_data_session, KeepaliveSchedule, ListenKeyApi, TickPlan};
