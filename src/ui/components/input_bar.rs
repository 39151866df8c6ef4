use eframe::egui;

/// Returns `true` when the user asked to send the current text.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> bool {
    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add_enabled(
            enabled,
            egui::TextEdit::singleline(input_text).hint_text("Type a message…"),
        );
        if ui
            .add_enabled(enabled && !input_text.trim().is_empty(), egui::Button::new("Send"))
            .clicked()
        {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
            response.request_focus();
        }
    });
    send
}
