use std::path::Path;

use sensei_pssh::KeyId;

use crate::{config::DecryptorKind, process::Invocation};

/// Command line removing the CENC layer of `input` with a raw key.
///
/// `input` and `output` are file names inside `dir`, which becomes the working directory of the
/// tool. shaka-packager splits its stream descriptor on `,`, so no directory name may reach it.
pub fn decrypt_invocation(
    kind: DecryptorKind,
    program: &Path,
    kid: &KeyId,
    key: &str,
    dir: &Path,
    input: &str,
    output: &str,
) -> Invocation {
    let invocation = Invocation::new(program).current_dir(dir);
    match kind {
        DecryptorKind::ShakaPackager => invocation
            .arg("--enable_raw_key_decryption")
            .arg("--keys")
            .arg(format!("key_id={kid}:key={key}"))
            .arg(format!("input={input},stream_selector=0,output={output}")),
        DecryptorKind::Mp4Decrypt => invocation
            .arg("--key")
            .arg(format!("{kid}:{key}"))
            .arg(input)
            .arg(output),
    }
}
