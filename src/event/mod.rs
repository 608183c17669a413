//! UPS 事件：代码、分类、参数解析与记录

pub mod classifier;
pub mod code;
pub mod model;
pub mod parser;
pub mod recorder;
pub mod severity;

pub use classifier::EventClassifier;
pub use code::EventCode;
pub use model::{Event, NewEvent, NotificationRule};
pub use parser::{ArgumentParser, NotificationForm, ParseError, ParsedNotification};
pub use recorder::{source_ip_from_ups_id, EventRecorder, REALTIME_TOPIC};
pub use severity::{get_severity, Severity};
