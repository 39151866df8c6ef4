use eframe::egui;

use crate::common::{ChatMessage, Role};

/// Renders a conversation. Messages sent by `own_role` are right-aligned.
pub fn render(ui: &mut egui::Ui, messages: &[ChatMessage], own_role: Role) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if messages.is_empty() {
                ui.label(egui::RichText::new("No messages yet").weak());
                return;
            }

            for message in messages {
                let own = message.sender_role == own_role;
                let layout = if own {
                    egui::Layout::right_to_left(egui::Align::TOP)
                } else {
                    egui::Layout::left_to_right(egui::Align::TOP)
                };
                ui.with_layout(layout, |ui| {
                    ui.vertical(|ui| {
                        ui.label(
                            egui::RichText::new(format!(
                                "{} · {}",
                                message.sender_display_name,
                                message.created_at.format("%H:%M")
                            ))
                            .small()
                            .weak(),
                        );
                        ui.label(&message.content);
                    });
                });
                ui.add_space(4.0);
            }
        });
}
