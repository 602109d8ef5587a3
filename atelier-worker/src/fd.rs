//! SCM_RIGHTS descriptor transfer for socket handoff.
//!
//! The handoff message and the descriptor travel in a single `sendmsg`
//! call, so the receiver always observes the descriptor together with the
//! first byte of its routing metadata.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

/// Control-message buffer for a single descriptor, aligned for `cmsghdr`.
/// CMSG_SPACE for one fd is 24 on 64-bit Linux; 64 covers every supported
/// platform.
#[repr(align(8))]
struct ControlBuf([u8; 64]);

/// Send `payload` over the Unix stream socket `channel_fd` with `fd`
/// attached as an SCM_RIGHTS control message.
///
/// Returns the number of payload bytes accepted, which on a stream socket
/// may be fewer than `payload.len()`; the descriptor itself always travels
/// with the first accepted byte. The caller finishes any remainder with
/// plain writes.
///
/// # Errors
/// Returns the underlying `sendmsg` error, including `WouldBlock` when the
/// socket is nonblocking and full.
pub(crate) fn send_with_fd(channel_fd: RawFd, payload: &[u8], fd: RawFd) -> io::Result<usize> {
    let fd_len = mem::size_of::<RawFd>() as libc::c_uint;
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr().cast_mut().cast::<libc::c_void>(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuf([0u8; 64]);

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr().cast::<libc::c_void>();
    #[allow(clippy::cast_possible_truncation)]
    {
        msg.msg_controllen = unsafe { libc::CMSG_SPACE(fd_len) } as _;
    }

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        #[allow(clippy::cast_possible_truncation)]
        {
            (*cmsg).cmsg_len = libc::CMSG_LEN(fd_len) as _;
        }
        std::ptr::copy_nonoverlapping(
            std::ptr::addr_of!(fd).cast::<u8>(),
            libc::CMSG_DATA(cmsg),
            mem::size_of::<RawFd>(),
        );
    }

    let sent = unsafe { libc::sendmsg(channel_fd, &msg, 0) };
    if sent < 0 {
        Err(io::Error::last_os_error())
    } else {
        #[allow(clippy::cast_sign_loss)]
        Ok(sent as usize)
    }
}
