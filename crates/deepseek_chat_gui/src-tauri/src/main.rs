// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::process;

use deepseek_chat_client::{config, logging};

fn main() {
    #[cfg(target_os = "linux")]
    sanitize_gtk_environment();

    logging::init();

    // The key is read once here; without it no window is opened.
    let startup = match config::load_startup(None) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("startup failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    deepseek_chat_gui_lib::run(startup);
}

/// Drop the global-menu GTK module, which trips a Gdk-CRITICAL assertion on
/// Wayland, and keep WebKit off the DMA-BUF renderer.
#[cfg(target_os = "linux")]
fn sanitize_gtk_environment() {
    use std::env;

    if let Ok(modules) = env::var("GTK_MODULES") {
        let kept: Vec<&str> = modules
            .split(':')
            .filter(|m| !m.contains("appmenu-gtk-module"))
            .collect();
        if kept.is_empty() {
            env::remove_var("GTK_MODULES");
        } else {
            env::set_var("GTK_MODULES", kept.join(":"));
        }
    }

    if env::var_os("WEBKIT_DISABLE_DMABUF_RENDERER").is_none() {
        env::set_var("WEBKIT_DISABLE_DMABUF_RENDERER", "1");
    }
}
