use std::io::Cursor;
use std::path::Path;

use super::features::AudioBuffer;

fn spec_for(buffer: &AudioBuffer) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode a recording as a 16-bit mono WAV file in memory, ready for upload.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec_for(buffer))?;
        for &sample in &buffer.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), hound::Error> {
    let mut writer = hound::WavWriter::create(path, spec_for(buffer))?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    log::debug!(
        "Wrote {:.1}s recording to {}",
        buffer.duration_secs(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_wav_reads_back_with_same_samples() {
        let buffer = AudioBuffer::new(vec![0, 1200, -1200, i16::MAX, i16::MIN], 44100);
        let bytes = encode_wav(&buffer).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, buffer.samples);
    }

    #[test]
    fn writes_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.wav");
        write_wav(&path, &AudioBuffer::new(vec![7; 800], 8000)).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 800);
    }
}
