// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! USB CDC serial transport.
//!
//! The radar boards enumerate as a virtual COM port. The port is put into raw
//! mode and driven non-blocking through the tokio reactor.

use crate::protocol::Error;
use log::{debug, warn};
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    os::{
        fd::AsRawFd,
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
    pin::Pin,
    task::{ready, Context, Poll},
};
use tokio::io::{unix::AsyncFd, AsyncRead, AsyncWrite, ReadBuf};

#[cfg(target_os = "linux")]
const PORT_DIR: &str = "/dev/serial/by-id";
#[cfg(target_os = "linux")]
const PORT_PATTERN: &str = "IFX_CDC";

#[cfg(not(target_os = "linux"))]
const PORT_DIR: &str = "/dev";
#[cfg(not(target_os = "linux"))]
const PORT_PATTERN: &str = "cu.usb";

/// Lists serial ports that look like radar boards, sorted by path.
///
/// A missing port directory yields an empty list.
pub fn list_ports() -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(PORT_DIR) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut ports = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().contains(PORT_PATTERN) {
            ports.push(entry.path());
        }
    }
    ports.sort();
    Ok(ports)
}

/// An open serial port registered with the tokio reactor.
pub struct SerialPort {
    fd: AsyncFd<File>,
    path: PathBuf,
}

impl SerialPort {
    /// Opens the port for exclusive use in raw mode.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let open_err = |err| Error::OpenPort(path.display().to_string(), err);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(open_err)?;

        configure(&file).map_err(open_err)?;
        let fd = AsyncFd::new(file).map_err(open_err)?;

        debug!("opened serial port {}", path.display());
        Ok(SerialPort { fd, path })
    }

    /// Path the port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn configure(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();

    if unsafe { libc::ioctl(fd, libc::TIOCEXCL) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut tty = unsafe { std::mem::zeroed::<libc::termios>() };
    if unsafe { libc::tcgetattr(fd, &mut tty) } != 0 {
        return Err(io::Error::last_os_error());
    }

    unsafe { libc::cfmakeraw(&mut tty) };
    tty.c_cflag |= libc::CLOCAL | libc::CREAD;
    tty.c_cc[libc::VMIN] = 0;
    tty.c_cc[libc::VTIME] = 0;

    // USB CDC ignores the baud rate but some drivers reject B0.
    if unsafe { libc::cfsetspeed(&mut tty, libc::B115200) } != 0 {
        warn!("cfsetspeed failed: {}", io::Error::last_os_error());
    }

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tty) } != 0 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
        warn!("tcflush failed: {}", io::Error::last_os_error());
    }

    Ok(())
}

impl AsyncRead for SerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;

            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for SerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;

            match guard.try_io(|inner| inner.get_ref().write(buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_is_sorted() {
        let ports = list_ports().unwrap();
        let mut sorted = ports.clone();
        sorted.sort();
        assert_eq!(ports, sorted);
        for port in ports {
            assert!(port.to_string_lossy().contains(PORT_PATTERN));
        }
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        match SerialPort::open("/dev/does-not-exist-ifx") {
            Err(Error::OpenPort(port, err)) => {
                assert_eq!(port, "/dev/does-not-exist-ifx");
                assert_eq!(err.kind(), io::ErrorKind::NotFound);
            }
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("opened a missing port"),
        }
    }
}
