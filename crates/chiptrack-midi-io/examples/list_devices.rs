use chiptrack_midi_io::MidiService;

fn main() {
    let midi = MidiService::builder().io().build().unwrap();

    println!("=== MIDI Input Devices ===");
    let inputs = midi.inputs();
    if inputs.is_empty() {
        println!("  (none found)");
    }
    for dev in &inputs {
        println!("  [{}] {}", dev.handle.index(), dev.name);
    }

    println!("\n=== MIDI Output Devices ===");
    let outputs = midi.outputs();
    if outputs.is_empty() {
        println!("  (none found)");
    }
    for dev in &outputs {
        println!("  [{}] {}", dev.handle.index(), dev.name);
    }
}
