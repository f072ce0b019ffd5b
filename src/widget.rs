use eframe::egui::{Button, Color32, Label, RichText, Rounding};

pub fn heart_rate_label(bpm: u16) -> Label {
    let text = if bpm == 0 {
        String::from("--")
    } else {
        bpm.to_string()
    };
    let hr_text = RichText::new(format!("\u{2764} {text} BPM"))
        .color(Color32::RED)
        .size(40.0);

    Label::new(hr_text)
}

pub fn device_button(display_name: &str) -> Button<'static> {
    let device_text = RichText::new(display_name.to_owned())
        .color(Color32::WHITE)
        .size(20.0);

    Button::new(device_text)
        .fill(Color32::BLUE)
        .rounding(Rounding::same(8.0))
}

pub fn status_label(connected: bool, connecting: bool) -> Label {
    let (text, color) = if connected {
        ("\u{25cf} connected", Color32::GREEN)
    } else if connecting {
        ("\u{25cf} connecting...", Color32::YELLOW)
    } else {
        ("\u{25cf} disconnected", Color32::GRAY)
    };

    Label::new(RichText::new(text).color(color).size(16.0))
}

pub fn action_button(text: &str) -> Button<'static> {
    let button_text = RichText::new(text.to_owned())
        .color(Color32::WHITE)
        .size(20.0);

    Button::new(button_text)
        .fill(Color32::BLUE)
        .rounding(Rounding::same(8.0))
}
