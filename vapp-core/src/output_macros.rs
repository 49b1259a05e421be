//! Console output macros for the launcher CLI.
//!
//! Diagnostics go through `tracing`; these macros are only for the
//! human-facing summary the binary prints.

#[macro_export]
macro_rules! launch_println {
    () => {
        println!();
    };
    ($($arg:tt)*) => {
        println!("{}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! launch_error {
    ($($arg:tt)*) => {
        eprintln!("❌ {}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! launch_error_with_details {
    ($main:expr, $details:expr) => {
        eprintln!("❌ {}", $main);
        for detail in $details {
            eprintln!("   └─ {}", detail);
        }
    };
}

#[macro_export]
macro_rules! launch_success {
    ($($arg:tt)*) => {
        eprintln!("✓ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! launch_warning {
    ($($arg:tt)*) => {
        eprintln!("⚠ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! launch_progress {
    ($($arg:tt)*) => {
        eprintln!("▶ {}", format!($($arg)*));
    };
}
