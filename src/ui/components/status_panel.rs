use eframe::egui;

use crate::ui::state::{ChatState, ConnectionStatus};

pub fn render(ui: &mut egui::Ui, state: &ChatState) {
    ui.horizontal(|ui| {
        let color = match state.connection {
            ConnectionStatus::Connected => egui::Color32::GREEN,
            ConnectionStatus::Connecting { .. } | ConnectionStatus::Reconnecting { .. } => {
                egui::Color32::YELLOW
            }
            ConnectionStatus::Disconnected | ConnectionStatus::GaveUp { .. } => {
                egui::Color32::RED
            }
        };
        ui.colored_label(color, "●");
        ui.label(state.connection.to_string());

        if let Some(error) = &state.last_error {
            ui.separator();
            ui.colored_label(egui::Color32::LIGHT_RED, error);
        }
    });

    ui.collapsing("Recent events", |ui| {
        egui::ScrollArea::vertical()
            .max_height(160.0)
            .show(ui, |ui| {
                for event in state.debug_events.iter().rev().take(20) {
                    let time_str = event.timestamp.format("%H:%M:%S");
                    let color = match event.event_type.as_str() {
                        "CONNECTED" => egui::Color32::GREEN,
                        "DISCONNECTED" | "BOOTSTRAP_FAILED" | "REQUEST_FAILED" => {
                            egui::Color32::RED
                        }
                        "RECONNECT_SCHEDULED" => egui::Color32::YELLOW,
                        _ => egui::Color32::WHITE,
                    };

                    ui.horizontal(|ui| {
                        ui.colored_label(color, format!("[{}]", time_str));
                        ui.label(&event.message);
                    });
                }
            });
    });
}
