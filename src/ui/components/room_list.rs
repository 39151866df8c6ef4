use eframe::egui;

use crate::common::RoomSummary;

/// Staff room list. Returns the room the user clicked, if any.
pub fn render(ui: &mut egui::Ui, rooms: &[RoomSummary], open_room: Option<&str>) -> Option<String> {
    ui.heading("Conversations");
    ui.separator();

    if rooms.is_empty() {
        ui.label("No customer conversations yet");
        return None;
    }

    let mut clicked = None;
    egui::ScrollArea::vertical().show(ui, |ui| {
        for room in rooms {
            let selected = open_room == Some(room.room_id.as_str());
            let title = if room.counterparty_name.is_empty() {
                room.room_id.as_str()
            } else {
                room.counterparty_name.as_str()
            };

            let response = ui
                .vertical(|ui| {
                    ui.horizontal(|ui| {
                        if ui.selectable_label(selected, title).clicked() {
                            clicked = Some(room.room_id.clone());
                        }
                        if room.unread_count > 0 {
                            ui.colored_label(
                                egui::Color32::LIGHT_RED,
                                format!("● {}", room.unread_count),
                            );
                        }
                    });
                    if let Some(preview) = &room.last_message {
                        let when = room
                            .last_message_time
                            .map(|time| time.format("%d/%m %H:%M").to_string())
                            .unwrap_or_default();
                        ui.label(egui::RichText::new(format!("{when} {preview}")).small().weak());
                    }
                })
                .response;
            if !room.counterparty_email.is_empty() {
                response.on_hover_text(&room.counterparty_email);
            }
            ui.separator();
        }
    });
    clicked
}
