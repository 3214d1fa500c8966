use modgate_network::{message, Frame, NetworkError, NetworkResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read a length-prefixed bincode frame. Returns `None` on a clean close
/// between frames.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> NetworkResult<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(NetworkError::FrameTooLarge {
            size: len,
            limit: max_len,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;

    message::deserialize(&data).map(Some)
}

/// Serialize a frame with a length prefix and write it out.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame, max_len: usize) -> NetworkResult<()>
where
    W: AsyncWrite + Unpin,
{
    let data = message::serialize(frame)?;
    if data.len() > max_len {
        return Err(NetworkError::FrameTooLarge {
            size: data.len(),
            limit: max_len,
        });
    }
    let len = (data.len() as u32).to_be_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgate_network::Package;

    #[tokio::test]
    async fn test_frames_cross_a_stream_in_order() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let mut payload = Package::new();
        payload.write_string("1.0.0");
        write_frame(&mut client, &Frame::new("First", payload), 1024)
            .await
            .unwrap();
        write_frame(&mut client, &Frame::routed("Second", Package::new()), 1024)
            .await
            .unwrap();
        drop(client);

        let mut first = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(first.name, "First");
        assert_eq!(first.payload.read_string().unwrap(), "1.0.0");

        let second = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(second.name, "Second");
        assert!(second.routed);

        assert!(read_frame(&mut server, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(1_000_000u32).to_be_bytes()).await.unwrap();

        let err = read_frame(&mut server, 1024).await.unwrap_err();
        assert!(matches!(err, NetworkError::FrameTooLarge { size: 1_000_000, .. }));
    }
}
