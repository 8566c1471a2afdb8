//! Dumps the structure of the container read from stdin.
use rsnd::{FileFormat, FileHeader};
use std::io::Read;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut data = Vec::new();
    std::io::stdin().read_to_end(&mut data)?;

    let header = FileHeader::read(&data)?;
    println!("{:#?}", header);

    match FileFormat::detect(&data) {
        Some(FileFormat::Archive) => {
            let rsar = rsnd::SoundArchive::read(&data)?;
            println!("strings: {}", rsar.symbols.strings.len());
            println!("{:#?}", rsar.counts);
            for (i, group) in rsar.groups.iter().enumerate() {
                let name = rsar.string(group.name_index).unwrap_or("_anonymous_group_");
                println!("group {} {}: {} items", i, name, group.items.len());
            }
        }
        Some(FileFormat::Stream) => {
            let strm = rsnd::SoundStream::read(&data)?;
            println!("{:#?}", strm.info);
            println!("tracks: {:?}", strm.tracks);
        }
        Some(FileFormat::Wave) => {
            let rwav = rsnd::SoundWave::read(&data)?;
            println!("{:#?}", rwav.info);
            println!("sample count: {}", rwav.sample_count());
        }
        Some(FileFormat::WaveArchive) => {
            let rwar = rsnd::SoundWaveArchive::read(&data)?;
            println!("waves: {}", rwar.wave_count());
        }
        Some(FileFormat::Sequence) => {
            let rseq = rsnd::SoundSequence::read(&data)?;
            println!("code: {} bytes", rseq.code().len());
            println!("{:#?}", rseq.labels);
        }
        Some(FileFormat::Bank) => {
            let rbnk = rsnd::SoundBank::read(&data)?;
            println!("programs: {}", rbnk.program_count());
            println!("embedded waves: {}", rbnk.wave_count());
        }
        Some(FileFormat::Wsd) => {
            let rwsd = rsnd::SoundWsd::read(&data)?;
            println!("sounds: {}", rwsd.sound_count());
            println!("embedded waves: {}", rwsd.has_embedded_waves());
        }
        None => println!("unknown container {}", header.magic),
    }

    Ok(())
}
