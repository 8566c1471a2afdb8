//! Disassembles sequence bytecode from stdin, either bare or inside an `RSEQ`.
use rseq::{ArgRegister, MmlCmd};
use rsnd::SoundSequence;
use std::io::Read;

pub fn main() {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf).unwrap();

    let code = match buf.get(..4) {
        Some(magic) if magic == SoundSequence::MAGIC => {
            let seq = SoundSequence::read(&buf).unwrap();
            for label in &seq.labels {
                println!("{}: 0x{:06x}", label.name, label.offset);
            }
            seq.code().to_vec()
        }
        _ => buf,
    };

    let mut args = ArgRegister::default();
    let mut offset = 0;
    while offset < code.len() {
        match MmlCmd::read(&code, offset, &mut args) {
            Ok((cmd, next)) => {
                println!("{:06x}: {:?}", offset, cmd);
                if cmd.is_end() {
                    println!();
                }
                offset = next;
            }
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }
    }
}
