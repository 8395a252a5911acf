// Log helpers prefixed with the decorated module name. Debug and info lines
// are emitted only when the module's debug flag is set.

macro_rules! module_debug {
    ($id:expr, $($arg:tt)+) => {
        if $id.debug_active() {
            log::debug!("{} {}", $id.decorated(), format_args!($($arg)+));
        }
    };
}

macro_rules! module_info {
    ($id:expr, $($arg:tt)+) => {
        if $id.debug_active() {
            log::info!("{} {}", $id.decorated(), format_args!($($arg)+));
        }
    };
}

macro_rules! module_warn {
    ($id:expr, $($arg:tt)+) => {
        log::warn!("{} {}", $id.decorated(), format_args!($($arg)+))
    };
}

macro_rules! module_error {
    ($id:expr, $($arg:tt)+) => {
        log::error!("{} {}", $id.decorated(), format_args!($($arg)+))
    };
}
