pub mod progress_service;
pub mod sse_decoder;
pub mod stream_event;
pub mod stream_interpreter;
pub mod tool_result_parser;

pub use progress_service::{
    GeneratedCardProgress, PersistOutcome, PlanItemProgress, ProgressPersistence,
};
pub use sse_decoder::{RecordStream, SseLineDecoder, decode_byte_stream};
pub use stream_event::{StreamEvent, StreamRecord};
pub use stream_interpreter::{StreamInterpreter, TurnEffect, TurnPhase};
pub use tool_result_parser::{parse_card_titles, parse_tool_result};
