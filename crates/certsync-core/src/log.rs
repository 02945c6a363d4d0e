use candid::CandidType;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Level
///

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, CandidType, Display, Serialize, Deserialize,
)]
pub enum Level {
    Debug, // least severe
    Info,
    Ok,
    Warn,
    Error, // most severe
}

///
/// Topic
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[remain::sorted]
pub enum Topic {
    Config,
    Read,
    Reconcile,
    Store,
    Sync,
}

#[macro_export]
macro_rules! log {
    // =========================================
    // (1) With topic (normal + trailing comma)
    // =========================================
    ($topic:expr, $level:ident, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        let topic = $topic.to_string();
        $crate::log!(@inner Some(topic.as_str()), $crate::log::Level::$level, $fmt $(, $arg)*);
    }};

    // =========================================
    // (2) No topic (normal + trailing comma)
    // =========================================
    ($level:ident, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        $crate::log!(@inner None::<&str>, $crate::log::Level::$level, $fmt $(, $arg)*);
    }};

    // =========================================
    // INTERNAL
    // =========================================
    (@inner $topic:expr, $level:expr, $fmt:expr $(, $arg:expr)*) => {{
        let level = $level;
        let topic_opt: Option<&str> = $topic;

        if $crate::model::log::Log::enabled(level) {
            let message = format!($fmt $(, $arg)*);

            // append entry
            let crate_name = env!("CARGO_PKG_NAME");
            $crate::model::log::Log::append(crate_name, topic_opt, level, &message);

            if $crate::model::log::Log::echo() {
                let final_msg = if let Some(t) = topic_opt {
                    format!("[{t}] {message}")
                } else {
                    message
                };

                let (color, reset) = match level {
                    $crate::log::Level::Ok    => ("\x1b[32m", "\x1b[0m"),
                    $crate::log::Level::Info  => ("\x1b[34m", "\x1b[0m"),
                    $crate::log::Level::Warn  => ("\x1b[33m", "\x1b[0m"),
                    $crate::log::Level::Error => ("\x1b[31m", "\x1b[0m"),
                    $crate::log::Level::Debug => ("", ""),
                };

                let label = format!("{color}{:^5}{reset}", level.to_string().to_uppercase());

                eprintln!("{label}| {final_msg}");
            }
        }
    }};
}
