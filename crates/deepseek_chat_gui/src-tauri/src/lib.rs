//! Tauri application library: one chat window backed by a `ChatLoop`.

pub mod commands;

use std::sync::Arc;

use commands::{ChatState, Mirror, WebviewView};
use deepseek_chat_client::{ChatLoop, HttpTransport, Startup};
use tauri::{Manager, WebviewUrl, WebviewWindowBuilder};

pub fn run(startup: Startup) {
    let transport = Arc::new(HttpTransport::from_startup(&startup));
    let ui = startup.config.ui.clone();

    tauri::Builder::default()
        .setup(move |app| {
            let mirror = Mirror::default();
            let chat = ChatLoop::new(
                transport,
                WebviewView::new(app.handle().clone(), mirror.clone()),
            );
            app.manage(ChatState {
                handle: chat.handle(),
                mirror,
            });
            tauri::async_runtime::spawn(chat.run());

            let (width, height) = ui.size();
            WebviewWindowBuilder::new(app, "main", WebviewUrl::App("index.html".into()))
                .title(ui.title())
                .inner_size(f64::from(width), f64::from(height))
                .build()?;
            tracing::info!(title = ui.title(), width, height, "window opened");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::submit_message,
            commands::transcript_snapshot,
            commands::input_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
