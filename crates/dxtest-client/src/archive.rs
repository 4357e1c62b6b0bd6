use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io;
use std::path::Path;

/// Packs the contents of `src_dir` (not the directory itself) into a gzip tarball.
pub fn pack_dir(src_dir: &Path, dest: &Path) -> io::Result<()> {
    let file = fs_err::File::create(dest)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.follow_symlinks(false);
    tar.append_dir_all(".", src_dir)?;
    tar.into_inner()?.finish()?;
    Ok(())
}

/// Packs individual files into a gzip tarball, each stored under its file name.
pub fn pack_files(files: &[&Path], dest: &Path) -> io::Result<()> {
    let file = fs_err::File::create(dest)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for path in files {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' has no file name", path.display()),
            )
        })?;
        let mut input = fs_err::File::open(path)?;
        tar.append_file(name, input.file_mut())?;
    }
    tar.into_inner()?.finish()?;
    Ok(())
}

pub fn unpack(archive: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = fs_err::File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest_dir)
}
