#![no_main]

use libfuzzer_sys::fuzz_target;
use netkit_core::endpoint::SocketKind;
use netkit_core::sockaddr::{self, AddrInfoEntry, RawSockAddr, SOCKADDR_SIZE};

fuzz_target!(|data: &[u8]| {
    // Host-filled address buffers: anything must decode or error, never panic
    let mut bytes = [0u8; SOCKADDR_SIZE];
    let n = data.len().min(SOCKADDR_SIZE);
    bytes[..n].copy_from_slice(&data[..n]);
    let raw = RawSockAddr::from_bytes(bytes);
    let _ = raw.port();

    for kind in [SocketKind::Stream, SocketKind::Datagram] {
        let Ok(endpoint) = sockaddr::decode(&raw, kind) else {
            continue;
        };
        // Unterminated Unix paths decode but are too long to encode again
        if let Ok(encoded) = sockaddr::encode(&endpoint) {
            assert_eq!(sockaddr::decode(&encoded, kind).ok(), Some(endpoint));
        }
    }

    // Resolver entries: family(4) + addr(18) + socktype(4)
    if data.len() >= 26 {
        let mut entry = AddrInfoEntry::default();
        entry.family = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        entry.addr.copy_from_slice(&data[4..22]);
        entry.socktype = u32::from_le_bytes([data[22], data[23], data[24], data[25]]);
        let _ = entry.family();
        if let Some(addr) = entry.socket_addr() {
            assert_eq!(AddrInfoEntry::new(addr, entry.socktype).socket_addr(), Some(addr));
        }
    }
});
